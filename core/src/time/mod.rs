pub mod tempo;

pub use self::tempo::Tempo;
