mod common;
mod lifecycle;
mod review;
