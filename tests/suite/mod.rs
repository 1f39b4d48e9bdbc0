//! Integration test modules

mod boundary;
mod brief;
mod guess_card;
mod limits;
