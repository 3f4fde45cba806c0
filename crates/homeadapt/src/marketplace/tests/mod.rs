mod common;
mod lifecycle;
mod matching;
mod quotes;
