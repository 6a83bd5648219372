//! Black-box tests for the reply services; see `tests/`.
