//! Record model shared by the collector and the batch engine

pub mod channel;
pub mod energy;
pub mod reading;
pub mod summary;

pub use channel::{Channel, ChannelKind, ChannelOrigin, ChannelSpec, Component, EntityId};
pub use energy::{add_available, Energy, MeanAccumulator};
pub use reading::Reading;
pub use summary::{
    ActiveShare, Category, DailySummary, EnergyBreakdown, EnergyFlow, FlowTotals, PeriodEnergy,
    PeriodKey, PeriodSummary, Segment,
};
