pub mod post;
pub mod transitions;
