mod file_service_tests;
mod http_tests;
