pub mod frame;
pub mod framerate;
pub mod grabber;
pub mod history;
pub mod ring_buffer;
pub mod selfpipe;
