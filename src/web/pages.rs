use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::auth::oauth::UserInfo;

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!doctype html>\n<html>\n<head><meta charset=\"utf-8\"><title>{}</title></head>\n<body>\n{}\n</body>\n</html>\n",
        encode_text(title),
        body
    )
}

pub fn login() -> String {
    layout(
        "QuikNews",
        "<h1>QuikNews</h1>\n<p>Your newsletters, read aloud.</p>\n<p><a href=\"/login\">Sign in with Google</a></p>",
    )
}

/// `audio_url` is absent when the signed-in identity has no known email.
pub fn home(user: &UserInfo, audio_url: Option<&str>) -> String {
    let who = user
        .name
        .as_deref()
        .or(user.email.as_deref())
        .unwrap_or("there");

    let mut body = format!("<h1>Hello, {}</h1>\n", encode_text(who));
    if let Some(email) = &user.email {
        body.push_str(&format!("<p>Signed in as {}</p>\n", encode_text(email)));
    }
    match audio_url {
        Some(url) => body.push_str(&format!(
            "<audio controls src=\"{0}\"></audio>\n<p><a href=\"{0}\">Today's podcast</a></p>\n",
            encode_double_quoted_attribute(url)
        )),
        None => body.push_str("<p>No podcast is linked to this account yet.</p>\n"),
    }
    body.push_str("<p><a href=\"/logout\">Sign out</a></p>");
    layout("QuikNews", &body)
}
