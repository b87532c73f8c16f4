pub mod sweep;

pub use sweep::spawn_escalation_sweep;
