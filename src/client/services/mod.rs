pub mod api_client;
pub mod live_view;
pub mod mutations;
pub mod websocket_client;

#[cfg(test)]
pub mod testing;
