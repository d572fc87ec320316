pub mod wire;

pub use wire::{ApplicationContext, Collaborators, initialize};
