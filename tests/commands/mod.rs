//! Command-level tests against synthetic channels

mod test_parse;
