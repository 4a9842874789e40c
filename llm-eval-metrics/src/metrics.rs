pub mod aggregated;
pub mod bleu;
pub mod contains;
pub mod equals;
pub mod is_json;
pub mod levenshtein;
pub mod regex_match;
pub mod rouge;
pub mod sentiment;

pub use aggregated::*;
pub use bleu::*;
pub use contains::*;
pub use equals::*;
pub use is_json::*;
pub use levenshtein::*;
pub use regex_match::*;
pub use rouge::*;
pub use sentiment::*;
