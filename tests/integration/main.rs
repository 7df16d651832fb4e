// Integration tests

mod api_test;
mod generator_test;
mod helpers;
