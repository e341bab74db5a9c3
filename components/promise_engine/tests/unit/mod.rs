//! Unit tests for promise_engine


mod combinator_test;
