//! Inline keyboard builders
//!
//! Callback data stays short and ASCII (Telegram caps it at 64 bytes):
//! selection buttons carry catalog indices or record ids, not titles.

use crate::core::config;
use crate::dialogue::pagination::{Nav, Page};
use crate::dialogue::render::{Button, Markup};
use crate::dialogue::session::RosterEntry;

/// Back-to-menu destinations
pub mod section {
    pub const MAIN: &str = "main";
    pub const ADMIN: &str = "admin";
    pub const DOCTORS: &str = "doctors";
    pub const STATS: &str = "stats";
    pub const ADMINS: &str = "admins";
}

fn btn(label: impl Into<String>, data: impl Into<String>) -> Button {
    Button::new(label, data)
}

fn back_row(target: &str) -> Vec<Button> {
    vec![btn("↩ Вернуться в меню", format!("menu:{target}"))]
}

/// The universal cancel button, valid from every state
pub fn back_to_menu(target: &str) -> Markup {
    Markup::new().row(back_row(target))
}

pub fn main_menu(is_admin: bool) -> Markup {
    let mut markup = Markup::new()
        .row(vec![btn("Записаться на прием 📅", "appointment:start")])
        .row(vec![btn("Заказать звонок ☎", "callback:start")])
        .row(vec![btn("Оставить отзыв 📝", "feedback:start")]);
    if is_admin {
        markup = markup.row(vec![btn("❗Админская панель❗", "menu:admin")]);
    }
    markup
}

pub fn admin_panel() -> Markup {
    Markup::new()
        .row(vec![btn("Специалисты 🩺", "menu:doctors")])
        .row(vec![btn("Статистика 📊", "menu:stats")])
        .row(vec![btn("Администраторы ⚠", "menu:admins")])
        .row(back_row(section::MAIN))
}

pub fn doctors_menu() -> Markup {
    Markup::new()
        .row(vec![btn("Добавить ➕", "doctor:create"), btn("Удалить ➖", "doctor:delete")])
        .row(vec![btn("Обновить информацию 🔄", "doctor:update")])
        .row(back_row(section::ADMIN))
}

pub fn admins_menu() -> Markup {
    Markup::new()
        .row(vec![btn("Добавить ➕", "admin:create"), btn("Удалить ➖", "admin:delete")])
        .row(back_row(section::ADMIN))
}

pub fn stats_menu() -> Markup {
    Markup::new()
        .row(vec![btn("за 24 ЧАСА", "stats:day"), btn("за НЕДЕЛЮ", "stats:week")])
        .row(vec![btn("за МЕСЯЦ", "stats:month"), btn("за КВАРТАЛ", "stats:quarter")])
        .row(vec![btn("за ГОД", "stats:year")])
        .row(vec![btn("Указать период", "stats:custom")])
        .row(back_row(section::ADMIN))
}

pub fn confirmation_menu(target: &str) -> Markup {
    Markup::new()
        .row(vec![btn("❗ Подтвердить ❗", "confirm")])
        .row(vec![btn("Изменить", "change")])
        .row(back_row(target))
}

pub fn yes_no() -> Markup {
    Markup::new().row(vec![btn("✅ Да", "yes"), btn("❌ Нет", "no")])
}

pub fn experience_choice() -> Markup {
    Markup::new().row(vec![btn("Указать", "exp:yes"), btn("Не указывать ❌", "exp:no")])
}

pub fn science_degrees() -> Markup {
    Markup::new()
        .row(vec![btn("Доктор наук 🥇", "degree:phd"), btn("Кандидат наук 🥈", "degree:pre_phd")])
        .row(vec![btn("Отсутствует ❌", "degree:none")])
}

pub fn qual_categories() -> Markup {
    Markup::new()
        .row(vec![btn("Высшая 🥇", "qual:highest"), btn("Первая 🥈", "qual:first")])
        .row(vec![btn("Вторая 🥉", "qual:second"), btn("Отсутствует ❌", "qual:none")])
}

pub fn privilege_levels() -> Markup {
    Markup::new().row(vec![btn("Высокий ⬆", "priv:high"), btn("Низкий ⬇", "priv:low")])
}

pub fn consultation_types() -> Markup {
    Markup::new()
        .row(vec![btn("Онлайн 💻 (20 минут)", "cons:online")])
        .row(vec![btn("Очно в клинике 🏥", "cons:offline")])
        .row(back_row(section::MAIN))
}

pub fn communication_types() -> Markup {
    Markup::new().row(vec![btn("Чат 💬", "com:chat"), btn("Звонок 📞", "com:call")])
}

pub fn payment() -> Markup {
    Markup::new()
        .row(vec![btn("Оплатить", "pay")])
        .row(back_row(section::MAIN))
}

pub fn choose_doctor(doctor_id: i64) -> Markup {
    Markup::new().row(vec![btn("⬆ Выбрать ⬆", format!("doc:{doctor_id}"))])
}

/// Multi-select speciality keyboard with toggling marks, used by the doctor
/// creation/update flows. Buttons carry catalog indices.
pub fn speciality_toggle(catalog: &[String], marked: &[String], target: &str, allow_new: bool) -> Markup {
    let mut markup = Markup::new();
    let mut row = Vec::new();
    for (index, title) in catalog.iter().enumerate() {
        let label = if marked.contains(title) {
            format!("{title} ✓")
        } else {
            title.clone()
        };
        row.push(btn(label, format!("spec:{index}")));
        if row.len() == config::pagination::SPECIALITIES_PER_ROW {
            markup.rows.push(std::mem::take(&mut row));
        }
    }
    if !row.is_empty() {
        markup.rows.push(row);
    }
    if allow_new {
        markup = markup.row(vec![btn("Добавить специальности ➕", "specnew")]);
    }
    markup
        .row(vec![btn("ГОТОВО ✅", "done")])
        .row(back_row(target))
}

/// Multi-select roster keyboard (doctors or admins picked for deletion)
pub fn roster_toggle(pool: &[RosterEntry], chosen: &[i64], target: &str) -> Markup {
    let mut markup = Markup::new();
    for entry in pool {
        let label = if chosen.contains(&entry.id) {
            format!("{} ✓", entry.name)
        } else {
            entry.name.clone()
        };
        markup = markup.row(vec![btn(label, format!("pick:{}", entry.id))]);
    }
    markup
        .row(vec![btn("ГОТОВО ✅", "done")])
        .row(back_row(target))
}

/// Single-select roster keyboard (picking one doctor to edit)
pub fn roster_pick(pool: &[RosterEntry], target: &str) -> Markup {
    let mut markup = Markup::new();
    for entry in pool {
        markup = markup.row(vec![btn(entry.name.clone(), format!("pick:{}", entry.id))]);
    }
    markup.row(back_row(target))
}

/// Single-select speciality keyboard over the given titles
pub fn speciality_pick(titles: &[String], target: &str) -> Markup {
    let mut markup = Markup::new();
    let mut row = Vec::new();
    for (index, title) in titles.iter().enumerate() {
        row.push(btn(title.clone(), format!("spec:{index}")));
        if row.len() == config::pagination::SPECIALITIES_PER_ROW {
            markup.rows.push(std::mem::take(&mut row));
        }
    }
    if !row.is_empty() {
        markup.rows.push(row);
    }
    markup.row(back_row(target))
}

/// One page of the speciality catalog with position-dependent navigation
pub fn speciality_page(titles: &[String], page: &Page) -> Markup {
    let (start, end) = page.bounds();
    let mut markup = Markup::new();
    let mut row = Vec::new();
    for (index, title) in titles.iter().enumerate().take(end).skip(start) {
        row.push(btn(title.clone(), format!("spec:{index}")));
        if row.len() == config::pagination::SPECIALITIES_PER_ROW {
            markup.rows.push(std::mem::take(&mut row));
        }
    }
    if !row.is_empty() {
        markup.rows.push(row);
    }
    let nav_row = match page.nav() {
        Nav::None => Vec::new(),
        Nav::NextOnly => vec![btn("Вперед ➡", format!("nav:{}", page.index + 1))],
        Nav::PrevOnly => vec![btn("⬅ Назад", format!("nav:{}", page.index - 1))],
        Nav::PrevNext => vec![
            btn("⬅ Назад", format!("nav:{}", page.index - 1)),
            btn("Вперед ➡", format!("nav:{}", page.index + 1)),
        ],
    };
    if !nav_row.is_empty() {
        markup.rows.push(nav_row);
    }
    markup.row(back_row(section::MAIN))
}

/// Doctor parameter sections of the update flow
pub fn doctor_sections(target: &str) -> Markup {
    Markup::new()
        .row(vec![btn("ФИО 🔤", "sect:full_name"), btn("Фотография 📷", "sect:photo")])
        .row(vec![btn("Описание 📃", "sect:description"), btn("Стаж 📚", "sect:experience")])
        .row(vec![btn("Степень 🔬", "sect:science_degree"), btn("Категория 🏅", "sect:qual_category")])
        .row(vec![btn("Специальности 💼", "sect:speciality"), btn("Цена 💰", "sect:price")])
        .row(back_row(target))
}

/// Add/remove choice of the speciality-editing sub-flow
pub fn speciality_actions(target: &str) -> Markup {
    Markup::new()
        .row(vec![btn("Добавить ➕", "act:add"), btn("Удалить ➖", "act:del")])
        .row(back_row(target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn titles(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("Спец {i}")).collect()
    }

    #[test]
    fn speciality_page_carries_absolute_indices() {
        let catalog = titles(25);
        let page = Page::new(1, 10, 25);
        let markup = speciality_page(&catalog, &page);
        let first = &markup.rows[0][0];
        assert_eq!(first.data, "spec:10");
    }

    #[test]
    fn nav_buttons_follow_page_position() {
        let catalog = titles(25);

        let first = speciality_page(&catalog, &Page::new(0, 10, 25));
        let nav = &first.rows[first.rows.len() - 2];
        assert_eq!(nav.iter().map(|b| b.data.as_str()).collect::<Vec<_>>(), vec!["nav:1"]);

        let middle = speciality_page(&catalog, &Page::new(1, 10, 25));
        let nav = &middle.rows[middle.rows.len() - 2];
        assert_eq!(
            nav.iter().map(|b| b.data.as_str()).collect::<Vec<_>>(),
            vec!["nav:0", "nav:2"]
        );

        let last = speciality_page(&catalog, &Page::new(2, 10, 25));
        let nav = &last.rows[last.rows.len() - 2];
        assert_eq!(nav.iter().map(|b| b.data.as_str()).collect::<Vec<_>>(), vec!["nav:1"]);
    }

    #[test]
    fn toggle_marks_selected_titles() {
        let catalog = vec!["Терапевт".to_string(), "Хирург".to_string()];
        let marked = vec!["Хирург".to_string()];
        let markup = speciality_toggle(&catalog, &marked, section::DOCTORS, true);
        assert_eq!(markup.rows[0][0].label, "Терапевт");
        assert_eq!(markup.rows[0][1].label, "Хирург ✓");
    }
}
