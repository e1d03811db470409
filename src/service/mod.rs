pub mod agent;
pub mod calendar_gateway;
pub mod memory_calendar;
pub mod normalizer;
pub mod openai_service;
pub mod planner;
pub mod retry;
pub mod time_resolver;
