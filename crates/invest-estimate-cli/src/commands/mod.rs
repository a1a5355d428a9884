pub mod estimate;
pub mod fees;
pub mod indicators;
pub mod interest;
pub mod repayment;

use clap::ValueEnum;
use invest_estimate_core::estimate::ProjectCategory;

/// Project category as accepted on the command line.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CategoryArg {
    Construction,
    Agriculture,
    WaterConservancy,
}

impl From<CategoryArg> for ProjectCategory {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Construction => ProjectCategory::Construction,
            CategoryArg::Agriculture => ProjectCategory::Agriculture,
            CategoryArg::WaterConservancy => ProjectCategory::WaterConservancy,
        }
    }
}
