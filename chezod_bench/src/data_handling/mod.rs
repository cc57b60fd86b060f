pub mod chezod;
pub mod odinpred;
pub mod representations;
