use quote::{format_ident, quote};
use syn::Data;

const VERSION_FIELD: &str = "version";

pub fn repository(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let input = syn::parse_macro_input!(input as syn::DeriveInput);
    let create_struct_name = input.ident.clone();
    let name = create_struct_name.to_string();
    let entity_name = match name.strip_prefix("Create") {
        Some(entity) if !entity.is_empty() => entity.to_string(),
        _ => {
            let e = syn::Error::new(
                input.ident.span(),
                format!("Unexpected name {}, should start with Create", name),
            );
            return e.to_compile_error().into();
        }
    };
    let table_name = entity_name.to_lowercase();

    let data = match input.data {
        Data::Struct(data) => data,
        _ => {
            let e = syn::Error::new(input.ident.span(), "Unexpected data type, should be struct");
            return e.to_compile_error().into();
        }
    };

    if !data
        .fields
        .iter()
        .any(|f| f.ident.as_ref().is_some_and(|i| i == VERSION_FIELD))
    {
        let e = syn::Error::new(
            input.ident.span(),
            "Missing version field, should be Option<i64>",
        );
        return e.to_compile_error().into();
    }

    // unwrap is ok as we filter unnamed fields
    let fields = data
        .fields
        .iter()
        .filter(|f| f.ident.as_ref().is_some_and(|i| i != VERSION_FIELD))
        .collect::<Vec<_>>();
    let field_idents = fields
        .iter()
        .map(|f| f.ident.as_ref().unwrap())
        .collect::<Vec<_>>();
    let field_types = fields.iter().map(|f| &f.ty).collect::<Vec<_>>();
    let columns = field_idents.iter().map(|f| f.to_string()).collect::<Vec<_>>();

    let entity = format_ident!("{}", entity_name);
    let repo_name = format_ident!("{}Repository", entity_name);
    let repo_impl_name = format_ident!("{}RepositoryImpl", entity_name);

    let column_list = columns.join(",");
    let placeholders = columns.iter().map(|_| "?").collect::<Vec<_>>().join(",");
    let insert_cmd =
        format!("INSERT INTO {table_name}({column_list},version) VALUES ({placeholders},1)");
    let update_fields = columns
        .iter()
        .map(|f| format!("{} = ?", f))
        .collect::<Vec<_>>()
        .join(",");
    let update_cmd = format!(
        "UPDATE {table_name} SET {update_fields},version = ? WHERE id = ? AND version = ?"
    );
    let count_cmd = format!("SELECT count(*) FROM {table_name}");
    let select_many_query =
        format!("SELECT id,{column_list},version FROM {table_name} {{}} LIMIT ? OFFSET ?");
    let select_one_query = format!("SELECT id,{column_list},version FROM {table_name} WHERE id = ?");
    let delete_cmd = format!("DELETE FROM {table_name} WHERE id = ?");
    let exists_cmd = format!("SELECT count(*) FROM {table_name} WHERE id = ?");

    quote! {
        #[derive(Debug, serde::Serialize, serde::Deserialize, Clone, sqlx::FromRow)]
        pub struct #entity {
            pub id: i64,
            #(pub #field_idents: #field_types,)*
            pub version: i64,
        }

        const VALID_ORDER_FIELDS: &[&str] = &["id", #(#columns),*];

        pub type #repo_name = #repo_impl_name<sqlx::Pool<crate::ChosenDB>>;

        pub struct #repo_impl_name<E> {
            executor: E,
        }

        impl<'c, E> #repo_impl_name<E>
        where
            for<'a> &'a E: sqlx::Executor<'c, Database = crate::ChosenDB>,
        {
            pub fn new(executor: E) -> Self {
                Self { executor }
            }

            pub async fn create(&self, payload: #create_struct_name) -> crate::error::Result<#entity> {
                let result = sqlx::query(#insert_cmd)
                    #(.bind(&payload.#field_idents))*
                    .execute(&self.executor)
                    .await?;

                self.get(result.last_insert_rowid()).await
            }

            pub async fn update(&self, id: i64, payload: #create_struct_name) -> crate::error::Result<#entity> {
                let version = payload.version.ok_or_else(|| {
                    tracing::debug!("No version provided");
                    crate::error::Error::MissingVersion
                })?;
                let result = sqlx::query(#update_cmd)
                    #(.bind(&payload.#field_idents))*
                    .bind(version + 1)
                    .bind(id)
                    .bind(version)
                    .execute(&self.executor)
                    .await?;

                if result.rows_affected() == 0 {
                    Err(crate::error::Error::FailedUpdate { id, version })
                } else {
                    self.get(id).await
                }
            }

            pub async fn count(&self) -> crate::error::Result<u64> {
                let count: i64 = sqlx::query_scalar(#count_cmd)
                    .fetch_one(&self.executor)
                    .await?;
                Ok(count as u64)
            }

            pub async fn list(&self, params: crate::ListingParams) -> crate::error::Result<crate::Batch<#entity>> {
                let order = params.ordering(VALID_ORDER_FIELDS)?;
                let rows = sqlx::query_as::<_, #entity>(&format!(#select_many_query, order))
                    .bind(params.limit)
                    .bind(params.offset)
                    .fetch_all(&self.executor)
                    .await?;
                let total = self.count().await?;
                Ok(crate::Batch {
                    offset: params.offset,
                    limit: params.limit,
                    total,
                    rows,
                })
            }

            pub async fn list_all(&self) -> crate::error::Result<Vec<#entity>> {
                self.list(crate::ListingParams::default())
                    .await
                    .map(|batch| batch.rows)
            }

            pub async fn get(&self, id: i64) -> crate::error::Result<#entity> {
                sqlx::query_as::<_, #entity>(#select_one_query)
                    .bind(id)
                    .fetch_optional(&self.executor)
                    .await?
                    .ok_or_else(|| crate::error::Error::RecordNotFound(#entity_name.to_string()))
            }

            pub async fn delete(&self, id: i64) -> crate::error::Result<()> {
                let res = sqlx::query(#delete_cmd)
                    .bind(id)
                    .execute(&self.executor)
                    .await?;

                if res.rows_affected() == 0 {
                    return Err(crate::error::Error::RecordNotFound(#entity_name.to_string()));
                }

                let remaining: i64 = sqlx::query_scalar(#exists_cmd)
                    .bind(id)
                    .fetch_one(&self.executor)
                    .await?;
                if remaining > 0 {
                    Err(crate::error::Error::DeleteNotConfirmed {
                        entity: #entity_name.to_string(),
                        id,
                    })
                } else {
                    Ok(())
                }
            }
        }
    }
    .into()
}
