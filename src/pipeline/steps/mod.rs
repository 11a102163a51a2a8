mod catalogue;
mod classify;
mod overview;
mod persist;
mod readme;

pub use catalogue::CatalogueStep;
pub use classify::ClassificationStep;
pub use overview::OverviewStep;
pub use persist::{PersistStep, OVERVIEW_TITLE};
pub use readme::ReadmeStep;
