pub mod bbox;
pub mod domain;
pub mod feature_filter;
pub mod predicate;
