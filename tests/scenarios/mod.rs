mod backpressure_tests;
mod connection_tests;
mod fanout_tests;
mod registry_tests;
