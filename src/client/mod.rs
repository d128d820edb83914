pub mod controller;
pub mod input;
pub mod render;
pub mod repl;
pub mod transport;

pub use controller::{ ChatController, ERROR_REPLY };
pub use input::{ InputBuffer, KeyInput };
pub use transport::{ ChatTransport, ChunkStream, HttpTransport, StreamChunk, TransportError };
