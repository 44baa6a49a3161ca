// Handlers module - API endpoint handlers

pub mod auth; // /auth/*
pub mod gateway; // /api/*
