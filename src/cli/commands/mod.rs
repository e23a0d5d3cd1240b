/// Transport commands against a Music Assistant player
pub mod control;
/// Local output listing
pub mod outputs;
/// Sendspin receiver run loop
pub mod play;
/// Music Assistant player listing
pub mod players;
