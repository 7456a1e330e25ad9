//! Message bodies
//!
//! Subscriber welcome messages come in a plain-text and an HTML rendering;
//! operator messages are plain text wrapped in a minimal HTML page.

/// Subject suffixes of operator messages
pub mod subjects {
    pub const PROFILE_ERROR: &str = "Error Processing Profile";
    pub const OPEN_ERROR: &str = "Error Opening Destination";
    pub const WRITE_ERROR: &str = "Error Writing Destination";
    pub const SUMMARY_ERROR: &str = "Summarization Error";
}

/// `"{service} - {suffix}"`
pub fn operator_subject(service: &str, suffix: &str) -> String {
    format!("{service} - {suffix}")
}

/// Subject of the end-of-run new subscriber report
pub fn new_subscribers_subject(service: &str, count: usize) -> String {
    format!("{service} - {count} New Subscribers")
}

pub fn new_subscribers_body(count: usize) -> String {
    format!("{count} new subscribers have been added.")
}

pub fn welcome_text(service: &str, first_name: &str, destination: &str) -> String {
    format!(
        "{first_name},\r\n\r\n\
         Thank you for subscribing to the {service}. We've created a Google Sheet and \
         populated it with your statistics. This data will be refreshed on a daily basis \
         so that you can keep up with your ever-changing information. Your Google Sheet \
         can be found here: {destination}.\r\n\r\n\
         Feel free to use this data however you like, including building your own \
         statistics visualization. Because the sheet is refreshed automatically, anything \
         you build on top of it stays up to date without manual intervention.\r\n\r\n\
         If you have any questions or would like to unsubscribe, reply to this message.\r\n\r\n\
         Thanks"
    )
}

/// HTML welcome; name, service and link are escaped
pub fn welcome_html(service: &str, first_name: &str, destination: &str) -> String {
    const P: &str = r#"<p style="font-family:Georgia;font-size:15px">"#;
    let service = html_escape::encode_text(service);
    let first_name = html_escape::encode_text(first_name);
    let destination = html_escape::encode_double_quoted_attribute(destination);
    format!(
        "<html>\n<head></head>\n<body>\n\
         {P}{first_name},</p>\n\
         {P}Thank you for subscribing to the {service}. We've created a Google Sheet and \
         populated it with your statistics. This data will be refreshed on a daily basis \
         so that you can keep up with your ever-changing information. Your Google Sheet \
         can be found here: <a href=\"{destination}\">Your Stats</a></p>\n\
         {P}Because the sheet is refreshed automatically, anything you build on top of it \
         stays up to date without manual intervention.</p>\n\
         {P}If you have any questions or would like to unsubscribe, reply to this message.</p>\n\
         <br>\n{P}Thanks</p>\n</body>\n</html>"
    )
}

pub fn operator_html(body: &str) -> String {
    let body = html_escape::encode_text(body);
    format!("<html>\n<head></head>\n<body>\n<p>{body}</p>\n</body>\n</html>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subjects() {
        assert_eq!(
            operator_subject("Stats Service", subjects::SUMMARY_ERROR),
            "Stats Service - Summarization Error"
        );
        assert_eq!(
            new_subscribers_subject("Stats Service", 3),
            "Stats Service - 3 New Subscribers"
        );
        assert_eq!(new_subscribers_body(3), "3 new subscribers have been added.");
    }

    #[test]
    fn test_welcome_mentions_destination() {
        let url = "https://docs.google.com/spreadsheets/d/abc12345";
        let text = welcome_text("Stats Service", "Ada", url);
        assert!(text.starts_with("Ada,"));
        assert!(text.contains(url));

        let html = welcome_html("Stats Service", "Ada", url);
        assert!(html.contains(&format!("href=\"{url}\"")));
        assert!(html.contains("Ada,</p>"));
    }

    #[test]
    fn test_html_bodies_escape_markup() {
        let html = welcome_html(
            "Stats Service",
            "<img src=x onerror=alert(1)>",
            "https://docs.google.com/spreadsheets/d/abc12345\"><script>",
        );
        assert!(!html.contains("<img"));
        assert!(html.contains("&lt;img src=x onerror=alert(1)&gt;,</p>"));
        assert!(!html.contains("\"><script>"));
        assert!(html.contains("abc12345&quot;&gt;&lt;script&gt;\""));

        let operator = operator_html("row 3 <b>failed</b> & stopped");
        assert!(operator.contains("row 3 &lt;b&gt;failed&lt;/b&gt; &amp; stopped"));
    }
}
