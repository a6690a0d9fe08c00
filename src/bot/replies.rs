//! User-facing message text.

use crate::knowledge::{Knowledge, is_truthy, scalar_text};

const RULE_WIDTH: usize = 30;

pub const RATE_LIMITED: &str = "⚠️ Too many requests. Please wait 1 minute.";
pub const ADMIN_REQUIRED: &str = "❌ Administrator authorization required";

/// Frame `content` with the institution banner and website footer.
pub fn format_message(header: &str, content: &str) -> String {
    let rule = "-".repeat(RULE_WIDTH);
    format!(
        "🎓 ACT-AI | ACT\n{rule}\n🚩 {header}\n{rule}\n{content}\n\n🔗 [www.act.edu.et](http://www.act.edu.et)"
    )
}

pub fn welcome() -> String {
    format_message(
        "WELCOME TO ACT",
        "Official digital assistant for American College of Technology\n\
         • Student registration & payment assistance\n\
         • Academic schedule management\n\
         • Exam date notifications (Mid/Final)\n\
         • Guidance on grade information access\n\
         • School event announcements\n\n\
         ℹ️ Services I can help with:\n\
         1. Course Information & Fees\n\
         2. Cybersecurity Training Details\n\
         3. Master's Program Info\n\
         4. Certificate Collection Info\n\
         5. How to Access Grades (guidance)\n\n\
         Type /help for assistance options or ask your question.",
    )
}

pub fn cybersecurity(k: &Knowledge) -> String {
    let course = |field: &str| k.text_or(&["courses", "cybersecurity_training", field], "N/A");
    format_message(
        "CYBERSECURITY TRAINING 🔒",
        &format!(
            "🗓️ Schedule: {}\n📍 Location: {}\n💰 Price: {} {}\n📞 Contact: {}\n\n🔖 Discount: {}\n📲 Paid students join: t.me/cyber_classes_act",
            course("schedule"),
            course("location"),
            course("price"),
            k.text_or(&["courses", "cybersecurity_training", "currency"], "Br"),
            k.contact_phone(),
            course("discount"),
        ),
    )
}

/// One line per course that has a price: `• <title>: <price> <currency>`.
pub fn course_fees(k: &Knowledge) -> String {
    let lines: Vec<String> = k
        .entries(&["courses"])
        .into_iter()
        .filter_map(|course| {
            let price = course.get("price").filter(|p| is_truthy(p)).and_then(scalar_text)?;
            let title = course.get("title").and_then(scalar_text).unwrap_or_else(|| "N/A".into());
            let currency = course.get("currency").and_then(scalar_text).unwrap_or_else(|| "Br".into());
            Some(format!("• {title}: {price} {currency}"))
        })
        .collect();

    let content = if lines.is_empty() {
        "No fee data found.".to_string()
    } else {
        lines.join("\n")
    };
    format_message("COURSE FEES 💰", &content)
}

pub fn certificates(k: &Knowledge) -> String {
    format_message(
        "CERTIFICATE COLLECTION 🎓",
        &format!(
            "🏢 Pick‑up office: {}\n🕒 Hours: {}\n📞 Call: {}",
            k.text_or(&["certificate_info", "office"], "Registrar"),
            k.text_or(&["certificate_info", "hours"], "Mon‑Fri 8 AM‑5 PM"),
            k.contact_phone(),
        ),
    )
}

pub fn masters_programs(k: &Knowledge) -> String {
    let programs = k.items(&["masters_programs"]);
    if programs.is_empty() {
        return format_message("MASTER’S PROGRAMS", "No programs listed yet.");
    }
    let lines: Vec<String> = programs
        .iter()
        .map(|p| {
            let field = |name: &str| p.get(name).and_then(scalar_text).unwrap_or_else(|| "N/A".into());
            format!("• {} ({})", field("title"), field("duration"))
        })
        .collect();
    format_message("MASTER’S PROGRAMS 🎓", &lines.join("\n"))
}

pub fn grades() -> String {
    format_message(
        "VIEWING GRADES 📊",
        "1️⃣ Log in to the student portal → portal.act.edu.et\n\
         2️⃣ Click **Academics → Grades**\n\
         3️⃣ Choose the semester and press **View**\n\n\
         If you have trouble logging in, contact the registrar.",
    )
}

pub fn location(k: &Knowledge) -> String {
    format_message(
        "ACT LOCATION 🗺️",
        &format!(
            "📍 Address: {}\n🌐 Google Maps: {}",
            k.text_or(&["location", "address"], "ACT Main Campus"),
            k.text_or(&["location", "maps_link"], "https://maps.app.goo.gl/..."),
        ),
    )
}

pub fn contact(k: &Knowledge) -> String {
    format_message(
        "CONTACT ACT 📞",
        &format!(
            "📱 General: {}\n📞 Office: {}\n📧 Email: {}",
            k.contact_phone(),
            k.text_or(&["contacts", "office_phone"], "N/A"),
            k.text_or(&["contacts", "email"], "N/A"),
        ),
    )
}

pub fn ai_response(answer: &str) -> String {
    format_message("ACT RESPONSE 📌", answer)
}

pub fn technical_difficulty(k: &Knowledge) -> String {
    format_message(
        "SYSTEM ERROR ⚠️",
        &format!("Technical difficulty. Please contact: {}", k.contact_phone()),
    )
}

pub fn id_validated() -> String {
    format_message("ID VALIDATED ✅", "How can I assist you?")
}

pub fn invalid_id_format(k: &Knowledge) -> String {
    format_message(
        "INVALID ID FORMAT ❌",
        &format!("Correct format: ACT-1234-56\nContact: {}", k.contact_phone()),
    )
}

pub fn knowledge_updated(keys: &[String]) -> String {
    format_message("KNOWLEDGE UPDATED ✅", &format!("Updated: {}", keys.join(", ")))
}

pub fn update_failed(reason: &str) -> String {
    format_message("UPDATE FAILED ❌", reason)
}
