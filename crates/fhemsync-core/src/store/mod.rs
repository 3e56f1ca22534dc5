// ── Device registry ──
//
// Mirrored device state keyed by name, plus the event/enumeration
// mutation rules that keep it in sync with the server.

mod apply;
mod registry;

pub use registry::DeviceRegistry;
