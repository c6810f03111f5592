pub mod identity;
pub mod reconcile;
pub mod similarity;
