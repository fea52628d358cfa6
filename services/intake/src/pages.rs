//! HTML pages served by the intake API.
//!
//! Every interpolated value passes through `html_escape`.

use crate::item::{ItemId, ItemRecord};
use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
</head>
<body>
<nav><a href="/add-item/">Add item</a> | <a href="/read_all_items/">All items</a></nav>
<h1>{title}</h1>
{body}
</body>
</html>
"#,
        title = text(title),
        body = body
    )
}

/// Submission form for a new item
pub fn add_item_page() -> String {
    layout(
        "Add item",
        r#"<form method="post" action="/add-item/" enctype="multipart/form-data">
<p><label>Name <input type="text" name="item_name" required></label></p>
<p><label>Description <textarea name="item_description" required></textarea></label></p>
<p><label>Image <input type="file" name="item_image" accept="image/*" required></label></p>
<p><button type="submit">Save</button></p>
</form>"#,
    )
}

/// Page shown after a successful create
pub fn success_page() -> String {
    layout(
        "Item saved",
        r#"<p>Data Successfully Saved.</p>
<p><a href="/add-item/">Add another item</a></p>"#,
    )
}

/// Every record with inline update and delete forms
pub fn items_page(items: &[ItemRecord]) -> String {
    if items.is_empty() {
        return layout("All items", "<p>No items found.</p>");
    }

    let rows: String = items.iter().map(item_row).collect();

    layout(
        "All items",
        &format!(
            "<table>\n<tr><th>ID</th><th>Image</th><th>Item</th><th></th></tr>\n{}</table>",
            rows
        ),
    )
}

fn item_row(item: &ItemRecord) -> String {
    let image = match item.image_url {
        Some(ref url) => format!(
            r#"<img src="{}" alt="{}" width="160">"#,
            attr(url),
            attr(&item.item_name)
        ),
        None => String::new(),
    };

    format!(
        r#"<tr>
<td>{id}</td>
<td>{image}</td>
<td>
<form method="post" action="/update_item/">
<input type="hidden" name="item_id" value="{id}">
<input type="text" name="item_name" value="{name}">
<input type="text" name="item_description" value="{description}">
<input type="hidden" name="image_url" value="{url}">
<input type="text" name="image_label" value="{label}">
<button type="submit">Update</button>
</form>
</td>
<td>
<form method="post" action="/delete_item/">
<input type="hidden" name="item_id" value="{id}">
<button type="submit">Delete</button>
</form>
</td>
</tr>
"#,
        id = item.id,
        image = image,
        name = attr(&item.item_name),
        description = attr(&item.item_description),
        url = attr(item.image_url.as_deref().unwrap_or_default()),
        label = attr(&item.image_label),
    )
}

/// Standalone edit form for one item
pub fn update_item_page(id: ItemId) -> String {
    layout(
        &format!("Update item {}", id),
        &format!(
            r#"<form method="post" action="/update_item/">
<input type="hidden" name="item_id" value="{id}">
<p><label>Name <input type="text" name="item_name" required></label></p>
<p><label>Description <textarea name="item_description" required></textarea></label></p>
<p><label>Image URL <input type="text" name="image_url"></label></p>
<p><label>Image label <input type="text" name="image_label"></label></p>
<p><button type="submit">Update</button></p>
</form>"#,
            id = id
        ),
    )
}

/// Delete confirmation for one item
pub fn delete_item_page(id: ItemId) -> String {
    layout(
        &format!("Delete item {}", id),
        &format!(
            r#"<form method="post" action="/delete_item/">
<input type="hidden" name="item_id" value="{id}">
<p>Delete item {id}?</p>
<p><button type="submit">Delete</button></p>
</form>"#,
            id = id
        ),
    )
}
