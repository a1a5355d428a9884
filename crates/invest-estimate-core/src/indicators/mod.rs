pub mod cash_flow;
pub mod metrics;

pub use cash_flow::{
    financial_indicators, project_cash_flows, CashFlowRow, FinancialIndicators, IndicatorInput,
    IndicatorSet, ProjectCashFlowInput, ProjectCashFlows,
};
pub use metrics::{irr, npv, payback, IrrEstimate, Payback, DEFAULT_IRR_GUESS};
