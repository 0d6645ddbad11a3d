//! Markup and JSON payloads shaped like the portals' own responses

use serde_json::{json, Value};

/// Token-replay login page with its anti-forgery token
pub const LOGIN_PAGE: &str = r#"<!DOCTYPE html>
<html><body>
<form action="/Login" method="post" class="login-form">
  <input name="__RequestVerificationToken" type="hidden" value="fixture-token-123" />
  <input type="text" name="Login" placeholder="E-mail" />
  <input type="password" name="Password" />
  <button type="submit">Entrar</button>
</form>
</body></html>"#;

/// Login page of a portal that stopped embedding the token
pub const LOGIN_PAGE_WITHOUT_TOKEN: &str = r#"<!DOCTYPE html>
<html><body>
<form action="/Login" method="post">
  <input type="text" name="Login" />
  <input type="password" name="Password" />
</form>
</body></html>"#;

/// Comanda detail fragment with two service lines and a client
#[must_use]
pub fn comanda_detail(client_id: &str, date: &str, number: &str) -> String {
    format!(
        r#"<div class="modal-body">
  <input type="hidden" name="cliente" value="{client_id}">
  <input type="text" id="nomeCliente" class="form-control" value="Cliente {client_id}" readonly>
  <input type="text" id="dataComanda" class="form-control" value="{date}">
  <input type="text" id="numeroDaComanda" value="{number}">
  <table class="table"><tbody>
    <tr id="item-1" class='itemComanda'>
      <td><input type="hidden" name="item[]" value="Corte Feminino">
      <input type="hidden" name="itemTipo[]" value="S">
      <input type="hidden" name="comandaItemId[]" value="9001">
      <select class="form-control sltServico" data-selected-id="15"></select>
      <select class="form-control sltProf" data-selected-id="3"></select>
      <input name="itemQtde[]" value="1"><input name="itemValor[]" value="120.00">
      <input name="itemDesconto[]" value="0"><input name="itemTotal[]" value="120.00"></td>
    </tr>
    <tr id="item-2" class='itemComanda'>
      <td><input type="hidden" name="item[]" value="Escova">
      <input name="itemValor[]" value="45,50"><input name="itemTotal[]" value="45,50"></td>
    </tr>
  </tbody></table>
</div>"#
    )
}

/// Client form fragment carrying the contact fields
#[must_use]
pub fn client_form(client_id: &str) -> String {
    format!(
        r#"<form id="formCliente">
  <input type="hidden" name="id" value="{client_id}">
  <input type="text" id="nome" value="Cliente {client_id}">
  <input type="text" id="celular" class="phone" value="(82) 99999-1234">
  <input type="email" name="email" value="cliente{client_id}@example.com">
</form>"#
    )
}

/// Action column of a comanda list row
#[must_use]
pub fn comanda_action_cell(id: &str) -> String {
    format!(
        r#"<a href="javascript:void(0)" onclick="financeiroComanda.abrirComanda('{id}', 'comanda')"><i class="fa fa-eye"></i></a>"#
    )
}

/// DataTables page of comandas
#[must_use]
pub fn comanda_list(ids: &[&str]) -> Value {
    let rows: Vec<Value> = ids
        .iter()
        .map(|id| json!([id, "01/05/2024", "Cliente", "R$ 165,50", "Aberta", comanda_action_cell(id)]))
        .collect();
    json!({
        "draw": 1,
        "recordsTotal": ids.len(),
        "recordsFiltered": ids.len(),
        "aaData": rows,
    })
}

/// DataTables page of clients
#[must_use]
pub fn client_list() -> Value {
    json!({
        "draw": 1,
        "recordsTotal": 2,
        "data": [
            [
                "<div class=\"client-name\">\nJoana Lima\n<small>#12</small></div>",
                "<b>E-mail: </b>joana@example.com<br><span data-ddi=\"55\" class=\"should-format-phone-number\">82999991234</span>",
                "15/03"
            ],
            [
                "<div>\nPedro Alves\n</div>",
                "<span data-ddi=\"55\" class=\"should-format-phone-number\">8232211234</span>",
                ""
            ]
        ]
    })
}

/// Scheduler page with items deliberately out of start order
#[must_use]
pub fn schedule() -> Value {
    json!({
        "Data": [
            {
                "Id": 502,
                "Client_Id": 78,
                "Client_Name": "Bruno",
                "Item_Id": 11,
                "Item_Name": "Barba",
                "Start": "/Date(1714572000000)/",
                "End": "/Date(1714573800000)/",
                "Status": 1,
                "StatusDescription": "Agendado"
            },
            {
                "Id": 501,
                "Client_Id": 77,
                "Client_Name": "Ana",
                "Client_FlattenedPhones": "82999991234",
                "Item_Id": 10,
                "Item_Name": "Corte",
                "Start": "/Date(1714564800000)/",
                "End": "/Date(1714566600000)/",
                "Status": 2.0,
                "StatusDescription": "Aguardando",
                "Locality_Id": 4,
                "Locality_Name": "Sala 1"
            },
            {
                "Id": 503,
                "Client_Name": "Sem horario",
                "Start": null,
                "Status": "99"
            }
        ],
        "Total": 3
    })
}
