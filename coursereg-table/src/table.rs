use serde::{Deserialize, Serialize};
use serde_json::Value;

use coursereg_query::QueryState;

use crate::column::Column;
use crate::confirm::ConfirmState;

/// Texts used by a [`DataTable`].
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct TableOptions {
    /// Shown for missing values of columns without their own placeholder.
    pub placeholder: String,
    /// Text of the single row shown for an empty list.
    pub empty_text: String,
    pub loading_text: String,
    pub actions_header: String,
    /// Confirmation prompt for tables without their own prompt builder.
    pub confirm_text: String,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            placeholder: "N/A".to_string(),
            empty_text: "No results.".to_string(),
            loading_text: "Loading...".to_string(),
            actions_header: "Actions".to_string(),
            confirm_text: "Delete this item?".to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RowAction {
    Edit,
    Delete,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TableRow {
    /// A row of the list, `index` is its position in the rendered slice.
    Data {
        index: usize,
        cells: Vec<String>,
        actions: Vec<RowAction>,
    },
    /// A single cell spanning the whole table.
    Placeholder { text: String, colspan: usize },
}

/// The rendered table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableView {
    pub headers: Vec<String>,
    pub rows: Vec<TableRow>,
}

impl TableView {
    pub fn column_count(&self) -> usize {
        self.headers.len()
    }
}

/// What to show for a query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TableContent {
    Loading(String),
    Failed(String),
    Table(TableView),
}

/// The open confirmation prompt.
#[derive(Clone, Copy, Debug)]
pub struct ConfirmPrompt<'a, T> {
    pub message: &'a str,
    pub row: &'a T,
}

type RowCallback<T> = Box<dyn FnMut(&T)>;

/// A table over rows of `T` with optional edit and delete actions.
///
/// Edits are dispatched right away. Deletes go through a confirmation step: the callback runs
/// only once [`confirm_delete`](Self::confirm_delete) is called for the pending row.
pub struct DataTable<T> {
    columns: Vec<Column<T>>,
    on_edit: Option<RowCallback<T>>,
    on_delete: Option<RowCallback<T>>,
    confirm_message: Option<Box<dyn Fn(&T) -> String>>,
    confirm: ConfirmState<T>,
    prompt: Option<String>,
    options: TableOptions,
}

impl<T> DataTable<T> {
    pub fn new(columns: Vec<Column<T>>) -> Self {
        Self {
            columns,
            on_edit: None,
            on_delete: None,
            confirm_message: None,
            confirm: ConfirmState::Idle,
            prompt: None,
            options: TableOptions::default(),
        }
    }

    pub fn on_edit(mut self, callback: impl FnMut(&T) + 'static) -> Self {
        self.on_edit = Some(Box::new(callback));
        self
    }

    pub fn on_delete(mut self, callback: impl FnMut(&T) + 'static) -> Self {
        self.on_delete = Some(Box::new(callback));
        self
    }

    /// Build the confirmation prompt from the row, e.g. `Delete course CS101?`.
    pub fn confirm_message(mut self, message: impl Fn(&T) -> String + 'static) -> Self {
        self.confirm_message = Some(Box::new(message));
        self
    }

    pub fn options(mut self, options: TableOptions) -> Self {
        self.options = options;
        self
    }

    pub fn columns(&self) -> &[Column<T>] {
        &self.columns
    }

    pub fn has_actions(&self) -> bool {
        self.on_edit.is_some() || self.on_delete.is_some()
    }

    fn row_actions(&self) -> Vec<RowAction> {
        let mut actions = Vec::new();
        if self.on_edit.is_some() {
            actions.push(RowAction::Edit);
        }
        if self.on_delete.is_some() {
            actions.push(RowAction::Delete);
        }
        actions
    }

    /// Run the edit callback for `row`. Returns `false` if the table has no edit action.
    pub fn request_edit(&mut self, row: &T) -> bool {
        match self.on_edit.as_mut() {
            Some(on_edit) => {
                on_edit(row);
                true
            }
            None => false,
        }
    }

    /// Select `row` for deletion and open the prompt, replacing an earlier pending row.
    ///
    /// Returns `false` (and stays idle) if the table has no delete action.
    pub fn request_delete(&mut self, row: T) -> bool {
        if self.on_delete.is_none() {
            return false;
        }
        let message = match &self.confirm_message {
            Some(build) => build(&row),
            None => self.options.confirm_text.clone(),
        };
        self.prompt = Some(message);
        self.confirm.request(row);
        true
    }

    /// Dispatch the pending deletion and close the prompt.
    ///
    /// Returns whether a row was pending. The outcome of the callback is none of the table's
    /// business, the prompt is closed either way.
    pub fn confirm_delete(&mut self) -> bool {
        self.prompt = None;
        let Some(row) = self.confirm.take() else {
            return false;
        };
        if let Some(on_delete) = self.on_delete.as_mut() {
            on_delete(&row);
        }
        true
    }

    /// Close the prompt without deleting anything.
    pub fn cancel_delete(&mut self) {
        self.prompt = None;
        self.confirm.cancel();
    }

    pub fn pending_delete(&self) -> Option<&T> {
        self.confirm.pending()
    }

    /// The confirmation prompt, if one is open.
    pub fn prompt(&self) -> Option<ConfirmPrompt<'_, T>> {
        let row = self.confirm.pending()?;
        let message = self.prompt.as_deref()?;
        Some(ConfirmPrompt { message, row })
    }
}

impl<T: Serialize> DataTable<T> {
    /// Render `rows` in column order.
    ///
    /// An empty slice renders one placeholder row spanning all columns, including the actions
    /// column.
    pub fn render(&self, rows: &[T]) -> TableView {
        let mut headers: Vec<String> = self
            .columns
            .iter()
            .map(|column| column.header().to_string())
            .collect();
        if self.has_actions() {
            headers.push(self.options.actions_header.clone());
        }

        if rows.is_empty() {
            return TableView {
                rows: vec![TableRow::Placeholder {
                    text: self.options.empty_text.clone(),
                    colspan: headers.len(),
                }],
                headers,
            };
        }

        let needs_json = self
            .columns
            .iter()
            .any(|column| column.accessor().needs_json());
        let actions = self.row_actions();

        let rows = rows
            .iter()
            .enumerate()
            .map(|(index, row)| {
                let json = if needs_json { to_json(row) } else { None };
                let cells = self
                    .columns
                    .iter()
                    .map(|column| column.resolve(row, json.as_ref(), &self.options.placeholder))
                    .collect();
                TableRow::Data {
                    index,
                    cells,
                    actions: actions.clone(),
                }
            })
            .collect();

        TableView { headers, rows }
    }

    /// Render a query the way list screens show it.
    ///
    /// Rows of an earlier successful read are still shown while re-fetching or after a failed
    /// re-fetch. A query which was never fetched shows as loading, not as an empty list.
    pub fn render_query(&self, state: &QueryState<T>) -> TableContent {
        match &state.data {
            Some(rows) => TableContent::Table(self.render(rows)),
            None if state.is_idle() || state.is_loading() => {
                TableContent::Loading(self.options.loading_text.clone())
            }
            None => match state.error_message() {
                Some(message) => TableContent::Failed(message),
                None => TableContent::Table(self.render(&[])),
            },
        }
    }
}

fn to_json<T: Serialize>(row: &T) -> Option<Value> {
    match serde_json::to_value(row) {
        Ok(value) => Some(value),
        Err(err) => {
            log::warn!("failed to serialize table row: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use serde_json::json;

    use coursereg_query::QueryStatus;

    use super::*;

    fn columns() -> Vec<Column<Value>> {
        vec![
            Column::new("course_id", "ID"),
            Column::new("course.title", "Title"),
        ]
    }

    #[test]
    fn test_headers() {
        let table = DataTable::new(columns());
        assert_eq!(table.render(&[json!({})]).headers, ["ID", "Title"]);

        let table = DataTable::new(columns()).on_delete(|_| ());
        let view = table.render(&[json!({ "course_id": 1 })]);
        assert_eq!(view.headers, ["ID", "Title", "Actions"]);
        assert_eq!(
            view.rows,
            [TableRow::Data {
                index: 0,
                cells: vec!["1".to_string(), "N/A".to_string()],
                actions: vec![RowAction::Delete],
            }]
        );
    }

    #[test]
    fn test_empty_placeholder_spans_all_columns() {
        let table = DataTable::<Value>::new(columns());
        let view = table.render(&[]);
        assert_eq!(
            view.rows,
            [TableRow::Placeholder {
                text: "No results.".to_string(),
                colspan: 2,
            }]
        );

        let table = DataTable::<Value>::new(columns())
            .on_edit(|_| ())
            .on_delete(|_| ());
        let view = table.render(&[]);
        assert_eq!(view.column_count(), 3);
        assert!(matches!(view.rows[..], [TableRow::Placeholder { colspan: 3, .. }]));
    }

    #[test]
    fn test_delete_needs_confirmation() {
        let deleted = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&deleted);
        let mut table = DataTable::new(columns())
            .on_delete(move |row: &Value| log.borrow_mut().push(row["course_id"].clone()))
            .confirm_message(|row| format!("Delete course {}?", row["course"]["title"]));

        let row = json!({ "course_id": 4, "course": { "title": "Compilers" } });
        assert!(table.request_delete(row.clone()));
        assert!(deleted.borrow().is_empty());

        let prompt = table.prompt().unwrap();
        assert_eq!(prompt.message, "Delete course \"Compilers\"?");
        assert_eq!(prompt.row, &row);

        assert!(table.confirm_delete());
        assert_eq!(*deleted.borrow(), [json!(4)]);
        assert!(table.prompt().is_none());

        assert!(!table.confirm_delete());
        assert_eq!(deleted.borrow().len(), 1);
    }

    #[test]
    fn test_query_states() {
        let table = DataTable::new(columns());

        let loading = TableContent::Loading("Loading...".to_string());
        assert_eq!(table.render_query(&QueryState::idle()), loading);

        let state = QueryState {
            status: QueryStatus::Loading,
            data: None,
            error: None,
        };
        assert_eq!(table.render_query(&state), loading);

        // a re-fetch keeps showing the previous rows
        let state = QueryState {
            status: QueryStatus::Loading,
            data: Some(vec![json!({ "course_id": 1 })]),
            error: None,
        };
        assert!(matches!(table.render_query(&state), TableContent::Table(_)));

        let state = QueryState {
            status: QueryStatus::Success,
            data: Some(Vec::new()),
            error: None,
        };
        match table.render_query(&state) {
            TableContent::Table(view) => assert_eq!(
                view.rows,
                [TableRow::Placeholder {
                    text: "No results.".to_string(),
                    colspan: 2,
                }]
            ),
            other => panic!("unexpected content {other:?}"),
        }
    }

    #[test]
    fn test_without_delete_action() {
        let mut table = DataTable::new(columns());
        assert!(!table.request_delete(json!({ "course_id": 1 })));
        assert!(table.pending_delete().is_none());
        assert!(!table.request_edit(&json!({ "course_id": 1 })));
    }
}
