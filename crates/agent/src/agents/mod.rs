pub mod hello;

pub use hello::HelloAgent;
