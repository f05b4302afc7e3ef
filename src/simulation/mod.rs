pub mod random_tree;
pub mod test_functions;
