pub mod descriptor;
pub mod render;
pub mod report;
