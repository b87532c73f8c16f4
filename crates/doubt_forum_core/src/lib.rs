pub mod analytics;
pub mod domain;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod memory;
pub mod ports;

pub use domain::{
    CourseAnalytics, Doubt, DoubtFilter, DoubtStatus, HistoryEntry, NewDoubt, Participant,
    Replier, ReplierRole, Reply, Role, StatusCount, StudentAction, TopicInsight, Viewer,
};
pub use engine::{EscalationEngine, DEGRADED_ANSWER};
pub use error::{EngineError, EngineResult};
pub use lifecycle::EscalationPolicy;
pub use memory::InMemoryDoubtStore;
pub use ports::{
    AnswerGenerationService, Clock, DoubtQuery, DoubtStore, ManualClock, PortError, PortResult,
    SystemClock,
};
