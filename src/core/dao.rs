use crate::core::domain::transaction::{QueryFacade, ToSql, TransactionError};

/// Static description of a mapped table.
#[derive(Debug, Clone, Copy)]
pub struct TableDescriptor {
    pub name: &'static str,
    /// Column names in the order `TableRecord::values` produces them.
    pub columns: &'static [&'static str],
    pub id_column: &'static str,
}

/// A plain value type that maps onto one table row.
pub trait TableRecord: Send + Sync {
    /// Column values in `TableDescriptor::columns` order.
    fn values(&self) -> Vec<Box<dyn ToSql>>;
}

/// Record mapper bound to one transactional handle.
///
/// Obtained through the coordinator, which binds it to whatever handle is
/// current for the calling flow at creation time. The mapper itself opens no
/// transactions; statements run in whatever scope the bound handle
/// represents.
pub struct TableDao<P, K> {
    table: TableDescriptor,
    facade: QueryFacade,
    id_fn: fn(&P) -> K,
}

impl<P, K> TableDao<P, K>
where
    P: TableRecord,
    K: ToSql + 'static,
{
    pub fn new(table: TableDescriptor, facade: QueryFacade, id_fn: fn(&P) -> K) -> Self {
        Self {
            table,
            facade,
            id_fn,
        }
    }

    pub async fn insert(&self, record: &P) -> Result<(), TransactionError> {
        let values = record.values();
        debug_assert_eq!(values.len(), self.table.columns.len());
        let placeholders: Vec<String> = (1..=self.table.columns.len())
            .map(|i| format!("${}", i))
            .collect();
        let query = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table.name,
            self.table.columns.join(", "),
            placeholders.join(", ")
        );
        self.facade.execute(&query, values).await?;
        Ok(())
    }

    /// Updates the non-identity columns of the row matching the record's id.
    /// Returns the number of rows matched.
    pub async fn update(&self, record: &P) -> Result<u64, TransactionError> {
        let values = record.values();
        debug_assert_eq!(values.len(), self.table.columns.len());

        let mut assignments = Vec::new();
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();
        for (column, value) in self.table.columns.iter().zip(values) {
            if *column != self.table.id_column {
                assignments.push(format!("{} = ${}", column, assignments.len() + 1));
                params.push(value);
            }
        }
        let query = format!(
            "UPDATE {} SET {} WHERE {} = ${}",
            self.table.name,
            assignments.join(", "),
            self.table.id_column,
            params.len() + 1
        );
        params.push(Box::new((self.id_fn)(record)));
        self.facade.execute(&query, params).await
    }

    pub async fn delete(&self, record: &P) -> Result<u64, TransactionError> {
        self.delete_by_id((self.id_fn)(record)).await
    }

    pub async fn delete_by_id(&self, id: K) -> Result<u64, TransactionError> {
        let query = format!(
            "DELETE FROM {} WHERE {} = $1",
            self.table.name, self.table.id_column
        );
        self.facade
            .execute(&query, vec![Box::new(id) as Box<dyn ToSql>])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::transaction::TransactionHandle;
    use async_trait::async_trait;
    use std::any::Any;
    use std::sync::{Arc, Mutex};

    struct RecordingHandle {
        statements: Mutex<Vec<(String, usize)>>,
    }

    #[async_trait]
    impl TransactionHandle for RecordingHandle {
        async fn execute(
            &self,
            query: &str,
            params: Vec<Box<dyn ToSql>>,
        ) -> Result<u64, TransactionError> {
            self.statements
                .lock()
                .unwrap()
                .push((query.to_string(), params.len()));
            Ok(1)
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct Widget {
        id: i32,
        label: String,
        active: bool,
    }

    impl TableRecord for Widget {
        fn values(&self) -> Vec<Box<dyn ToSql>> {
            vec![
                Box::new(self.id) as Box<dyn ToSql>,
                Box::new(self.label.clone()) as Box<dyn ToSql>,
                Box::new(self.active) as Box<dyn ToSql>,
            ]
        }
    }

    const WIDGETS: TableDescriptor = TableDescriptor {
        name: "widgets",
        columns: &["id", "label", "active"],
        id_column: "id",
    };

    fn dao() -> (Arc<RecordingHandle>, TableDao<Widget, i32>) {
        let handle = Arc::new(RecordingHandle {
            statements: Mutex::new(Vec::new()),
        });
        let facade = QueryFacade::new(handle.clone());
        (handle, TableDao::new(WIDGETS, facade, |widget| widget.id))
    }

    fn widget() -> Widget {
        Widget {
            id: 7,
            label: "gear".to_string(),
            active: true,
        }
    }

    #[tokio::test]
    async fn insert_builds_a_parameterized_statement() {
        let (handle, dao) = dao();
        dao.insert(&widget()).await.unwrap();

        assert_eq!(
            *handle.statements.lock().unwrap(),
            vec![(
                "INSERT INTO widgets (id, label, active) VALUES ($1, $2, $3)".to_string(),
                3
            )]
        );
    }

    #[tokio::test]
    async fn update_sets_non_identity_columns_and_filters_by_id() {
        let (handle, dao) = dao();
        assert_eq!(dao.update(&widget()).await.unwrap(), 1);

        assert_eq!(
            *handle.statements.lock().unwrap(),
            vec![(
                "UPDATE widgets SET label = $1, active = $2 WHERE id = $3".to_string(),
                3
            )]
        );
    }

    #[tokio::test]
    async fn delete_by_id_targets_the_identity_column() {
        let (handle, dao) = dao();
        assert_eq!(dao.delete_by_id(7).await.unwrap(), 1);

        assert_eq!(
            *handle.statements.lock().unwrap(),
            vec![("DELETE FROM widgets WHERE id = $1".to_string(), 1)]
        );
    }
}
