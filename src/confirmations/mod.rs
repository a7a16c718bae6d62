pub mod confirmation_controller;
pub mod confirmation_service;
