//! Command-level integration tests

mod test_erase;
mod test_kill;
