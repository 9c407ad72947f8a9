mod events;
pub mod registry;
pub mod rooms;

use socketioxide::{SocketIo, layer::SocketIoLayer};

use crate::state::AppState;

pub(crate) fn build_socket_layer(state: AppState) -> (SocketIoLayer, SocketIo) {
    let (layer, io) = SocketIo::builder().with_state(state).build_layer();
    events::register_namespace(&io);
    (layer, io)
}
