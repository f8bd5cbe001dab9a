pub mod annotation;
pub mod common_structs;
pub mod naming;

pub mod data_augmenters;
pub mod data_loaders;
pub mod data_transformers;
pub mod manifest;

/// An iterator over work items that knows its position, used to size progress reporting
pub trait DataLoader: Iterator {
    /// Returns the next element index, starting from 0
    fn next_element_index(&self) -> usize;
    /// Returns the index of the last element to be loaded
    fn max_elem_index(&self) -> usize;
}
