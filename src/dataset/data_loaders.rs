pub mod example_loader;
