mod common;
mod draw;
mod routing;
