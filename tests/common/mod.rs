#![allow(dead_code)]
#![allow(unused_imports)]

pub use dagrun_test_utils::*;
