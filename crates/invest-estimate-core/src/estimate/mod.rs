pub mod adjustment;
pub mod convergence;
pub mod cost_tree;
pub mod estimator;
pub mod loan;
pub mod part_a;
pub mod part_b;
pub mod policy;
pub mod repayment;
pub mod summary;

pub use adjustment::{AdjustmentStatus, AdjustmentSummary, FloorOutcome};
pub use convergence::{ConvergenceReport, LoopState};
pub use cost_tree::{CostBreakdown, CostItem, CostTree, NodeId};
pub use estimator::{estimate_investment, EstimateInput, InvestmentEstimate, PartTotal};
pub use loan::{
    construction_interest, distribute_drawdowns, round_loan_amount, ConstructionInterest,
    ConstructionInterestInput, LoanYear,
};
pub use part_a::{DraftedCostItem, ProjectCategory, ProjectParameters};
pub use part_b::{ancillary_fees, AncillaryFeeInput, AncillaryFees};
pub use policy::ConvergencePolicy;
pub use repayment::{
    repayment_schedule, RepaymentInput, RepaymentMethod, RepaymentSchedule, RepaymentYear,
};
pub use summary::SummaryParts;
