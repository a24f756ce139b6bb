mod value_repo;

/// Derives value entity (id, fields, version) and its repository from `Create<Entity>` struct.
/// The struct must have `version: Option<i64>` field, which is used for optimistic locking on update.
#[proc_macro_derive(ValueRepository, attributes(garde))]
pub fn value_repo(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    value_repo::repository(input)
}
