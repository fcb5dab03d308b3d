pub mod clock;
pub mod window;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use window::{elapsed_since_onset, is_expired, rest_gate, sample_iti, RestGate};
