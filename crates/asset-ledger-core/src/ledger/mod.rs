pub mod optimization;
pub mod seats;

pub use optimization::{
    compliance_summary, optimization_candidates, true_up_report, ComplianceSummary,
    OptimizationCandidate, TrueUpReport,
};
pub use seats::TrueUp;
