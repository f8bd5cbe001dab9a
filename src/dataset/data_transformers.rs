pub mod background_composer;
