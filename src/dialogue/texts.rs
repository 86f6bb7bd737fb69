//! User-facing message texts (HTML parse mode)
//!
//! All wording lives here so the flows read as pure logic. Step captions
//! follow the "<b>Раздел</b> — <b>Шаг N/M</b>" convention of the client
//! forms.

use crate::core::stats::{Period, StatReport};
use crate::storage::directory::{CommunicationType, ConsultationType, Doctor};

pub const LACK_OF_PRIVILEGES: &str = "У вас нет доступа к этому разделу ❌";

pub const TRY_AGAIN: &str = "Что-то пошло не так, попробуйте ещё раз 🔁";

pub const RESTART_REQUIRED: &str =
    "Не удалось сохранить ход диалога ❌\nПожалуйста, начните заново командой /start";

pub const HTML_LAYOUT_CHANGED: &str =
    "⚠️<b>Макет HTML страницы изменился</b>❗\nНеобходимо поправить генерацию ссылки";

pub const VIDEO_CONF_LINK: &str = "<b>Ссылка</b> для подключения:\n";

// ---------------------------------------------------------------------------
// Menus

pub fn menu_desc() -> String {
    "Добро пожаловать!\n\nТеперь записаться в клинику стало ещё проще!\n\nНиже выберите то, что вас интересует:"
        .to_string()
}

// ---------------------------------------------------------------------------
// Appointment request

pub const ASK_CONS_TYPE: &str = "<b>Записаться на прием 📅</b>\n\nВыберите тип консультации";

pub const ASK_REQUEST: &str =
    "<b>Записаться на прием 📅</b>  —  <b>Шаг 1/4</b>\n\nУкажите нужного специалиста или услугу";

pub const ASK_SPECIALITY: &str =
    "<b>Записаться на прием 📅</b>  —  <b>Шаг 1/5</b>\n\nВыберите нужную специальность";

pub const USERNAME_WARNING: &str = "❗❗❗\n\
    Убедительная просьба:\n\
    \u{20}  - <b>не менять @username</b> в Telegram до того, как с вами свяжется администратор\n\
    \u{20}  - проверить, что настройки конфиденциальности позволяют писать вам\n\
    ❗❗❗";

pub const CONFIRM_REQUEST_SUCCESS: &str = "✅✅✅\n\
    Ваша заявка успешно зарегистрирована!\n\
    В ближайшее время с Вами свяжется администратор.\n\
    ✅✅✅";

pub const PAYMENT_INSTRUCTION: &str = "<b>Записаться на прием 📅</b>  —  <b>Шаг 5/5</b>\n\n\
    <b>Что дальше</b>?\n\n\
    <b>1 шаг</b>:  В ближайшее (рабочее) время с вами свяжется администратор для согласования времени консультации\n\n\
    <b>2 шаг</b>:  После согласования времени вернитесь сюда и оплатите консультацию, нажав кнопку «<b>Оплатить</b>»\n\n\
    <b>3 шаг</b>:  После оплаты БОТ пришлет вам ссылку на консультацию\n\n\
    <b>Обращаем Ваше внимание, что длительность консультации не превышает 20 минут</b>❗";

pub const SUCCESSFUL_PAYMENT: &str = "✅✅✅\nОплата прошла успешно!\n✅✅✅\n\n\
    Для проведения консультации подключайтесь по ссылке в согласованное время\n\n\
    Ссылка будет прикреплена к данному сообщению в течение 2 минут";

pub fn chosen_speciality(speciality: &str) -> String {
    format!("Специалисты из раздела \"<b>{speciality}</b>\"\n⬇⬇⬇⬇⬇")
}

pub fn chosen_doctor(doctor: &str, speciality: &str) -> String {
    format!("<b>Записаться на прием 📅</b>  —  <b>Шаг 1/5</b>\n\nВыбран {speciality} — {doctor} ✅")
}

pub fn ask_dt_choice(stage: &str) -> String {
    format!("<b>Записаться на прием 📅</b>  —  <b>Шаг {stage}</b>\n\nЖелаете ли сейчас указать предпочтительное время/дату приема?")
}

pub fn no_dt(stage: &str) -> String {
    format!("<b>Записаться на прием 📅</b>  —  <b>Шаг {stage}</b>\n\nПредпочтительные дата/время не указаны 👌")
}

pub fn ask_dt(stage: &str) -> String {
    format!("<b>Записаться на прием 📅</b>  —  <b>Шаг {stage}</b>\n\nВведите удобные дату/время приема\n<u>Лучше указать несколько вариантов</u>")
}

pub fn ask_com_type(stage: &str) -> String {
    format!("<b>Записаться на прием 📅</b>  —  <b>Шаг {stage}</b>\n\nВыберите тип коммуникации с администратором")
}

pub fn com_type_choice(stage: &str, com_type: CommunicationType) -> String {
    let label = match com_type {
        CommunicationType::Call => "Звонок 📞",
        CommunicationType::Chat => "Чат 💬",
    };
    format!("<b>Записаться на прием 📅</b>  —  <b>Шаг {stage}</b>\n\nВыбран тип коммуникации «<b>{label}</b>»")
}

/// Phone prompt for the appointment and callback forms
pub fn ask_phone(title: &str, stage: &str, again: bool, instead: bool) -> String {
    let no_username = if instead {
        "❌ К сожалению, у вас <b>отсутствует @username</b> в Telegram\n\n"
    } else {
        ""
    };
    let request = if again {
        "Пожалуйста введите корректный номер (сотовый номер оператора РФ)"
    } else {
        "Введите контактный номер телефона"
    };
    format!("<b>{title}</b>  —  <b>Шаг {stage}</b>\n\n{no_username}{request}")
}

pub fn ask_name(title: &str, stage: &str) -> String {
    format!("<b>{title}</b>  —  <b>Шаг {stage}</b>\n\nВведите ваше имя")
}

/// Request card posted to the administrators' channel
pub fn appointment_request(
    name: &str,
    phone: Option<&str>,
    username: Option<&str>,
    consultation: ConsultationType,
    communication: CommunicationType,
    request: &str,
    speciality: Option<&str>,
    preferred_at: Option<&str>,
) -> String {
    let contact = match phone {
        Some(phone) => format!("+{phone}"),
        None => format!("@{}", username.unwrap_or("-")),
    };
    let cons = match consultation {
        ConsultationType::Online => "<b>❗Онлайн❗</b>",
        ConsultationType::Offline => "<b>Очно</b>",
    };
    let com = match communication {
        CommunicationType::Call => "Звонок",
        CommunicationType::Chat => "Чат",
    };
    let speciality_part = speciality
        .map(|sp| format!(" как {sp}"))
        .unwrap_or_default();
    format!(
        "<b>📅Запись📅</b>\n\
         <em>Имя</em>:  {name}\n\
         <em>Контакт</em>:  {contact}\n\
         <em>Тип консультации</em>:  {cons}\n\
         <em>Тип связи</em>:  {com}\n\
         <em>Специалист/Услуга</em>:  {request}{speciality_part}\n\
         <em>Пожелания по времени/дате</em>:  {}",
        preferred_at.unwrap_or("-")
    )
}

pub fn payment_details(charge_id: &str, amount: i64) -> String {
    format!(
        "✅ Консультация успешно оплачена\n🆔 <b>Код</b> транзакции: {charge_id}\n💰 <b>Сумма</b>: {amount} ₽"
    )
}

// ---------------------------------------------------------------------------
// Callback request

pub const CALLBACK_TITLE: &str = "Заказать звонок ☎";
pub const APPOINTMENT_TITLE: &str = "Записаться на прием 📅";

pub fn callback_request(name: &str, phone: &str) -> String {
    format!("<b>☎Обратный звонок☎</b>\n<em>Имя</em>:  {name}\n<em>Телефон</em>:  +{phone}")
}

// ---------------------------------------------------------------------------
// Feedback

pub const ASK_FEEDBACK: &str = "<b>Оставить отзыв 📝</b>  —  <b>Шаг 1/1</b>\n\n\
    Напишите текст вашего обращения, это может быть:\n\
    \u{20}  — отзыв\n\
    \u{20}  — обращение к администрации\n\
    \u{20}  — предложение по улучшению сервиса";

pub const CONFIRM_FEEDBACK_SUCCESS: &str = "✅✅✅\nВаш отзыв успешно отправлен администраторам!\n✅✅✅";

pub fn feedback_request(full_name: &str, username: Option<&str>, user_uid: i64, message: &str) -> String {
    let username = match username {
        Some(name) => format!("@{name}"),
        None => "-".to_string(),
    };
    format!(
        "<b>📝Обратная связь📝</b>\n\
         <em>Имя-Фамилия</em>:  {full_name}\n\
         <em>username</em>:  {username}\n\
         <em>id</em>:  {user_uid}\n\
         <em>Сообщение</em>:\n{message}"
    )
}

// ---------------------------------------------------------------------------
// Doctor creation / update

pub const ASK_TO_CHOOSE_SPECIALITIES: &str =
    "Выберите <b>специальности</b>, по которым будет консультировать специалист";

pub const ASK_TO_ADD_NEW_SPECIALITIES: &str =
    "Введите через запятую \",\" <b>новые специальности</b>, которые отсутствуют в списке";

pub const ASK_TO_SPECIFY_SPECIALITIES_TO_ADD: &str = "Укажите специальности, которые необходимо добавить";

pub const ASK_TO_SPECIFY_SPECIALITIES_TO_DEL: &str = "Укажите специальности, которые необходимо удалить";

pub const WARN_NOT_TO_CHOOSE_ALL_SPECIALITIES: &str = "Нельзя удалить все специальности❗\n\
    \u{20} - Если вы хотите удалить специалиста, то сделайте это в соответствующем разделе\n\
    \u{20} - Если же вы редактируете набор специальностей, то сначала добавьте новые";

pub const ASK_DOCTOR_NAME: &str = "Введите <b>ФИО</b>";

pub const ASK_DOCTOR_PHOTO: &str = "Отправьте <b>фото</b> как ДОКУМЕНТ";

pub const ASK_DOCTOR_PHOTO_AGAIN: &str =
    "Отправьте фото в корректном формате <b>как ДОКУМЕНТ</b>, НЕ как КАРТИНКУ";

pub const ASK_DOCTOR_DESCRIPTION: &str =
    "Введите <b>описание</b> (полный спектр специальностей, которыми владеет специалист)";

pub const ASK_TO_CHOOSE_EXPERIENCE: &str = "Хотите ли указать <b>опыт/стаж</b> специалиста?";

pub const ASK_DOCTOR_EXPERIENCE: &str =
    "Введите <b>опыт/стаж</b> специалиста в числовом формате (просто число)";

pub const ASK_DOCTOR_EXPERIENCE_AGAIN: &str =
    "Пожалуйста введите <b>целое число</b>, эквивалентное рабочему стажу специалиста";

pub const ASK_DOCTOR_SCIENCE_DEGREE: &str = "Выберите <b>ученую степень</b>";

pub const ASK_DOCTOR_QUAL_CATEGORY: &str = "Выберите <b>квалификационную категорию</b>";

pub const SUCCESSFUL_DOCTOR_CREATION: &str = "✅✅✅\nСпециалист успешно добавлен!\n✅✅✅";

pub const SUCCESSFUL_PARAMETER_CHANGE: &str = "✅✅✅\nДанные успешно обновлены!\n✅✅✅";

pub const ASK_TO_CHOOSE_DOCTOR: &str = "Выберите специалиста, для обновления информации";

pub const ASK_TO_CHOOSE_DOCTORS: &str =
    "Выберите <b>специалистов</b>, которых необходимо <b>удалить</b>";

pub const SUCCESSFUL_DOCTORS_DELETION: &str = "✅✅✅\nСпециалисты успешно удалены!\n✅✅✅";

pub fn ask_doctor_price(speciality: &str, again: bool) -> String {
    if again {
        format!("Пожалуйста введите <b>целое число</b>, эквивалентное цене (₽) приема по специальности \"<b>{speciality}</b>\"")
    } else {
        format!("Введите <b>цену (₽)</b> за прием по специальности \"<b>{speciality}</b>\" в числовом формате (просто число)")
    }
}

pub fn ask_to_choose_section(doc_name: &str) -> String {
    format!("Специалист \"<b>{doc_name}</b>\"\n\nВыберите <b>параметр</b>, который необходимо <b>изменить</b>")
}

pub fn current_value(doc_name: &str, value: Option<&str>) -> String {
    format!(
        "Специалист \"<b>{doc_name}</b>\"\n\nТекущее значение выбранного параметра \"<b>{}</b>\"",
        value.unwrap_or("Отсутствует")
    )
}

pub fn doc_specialities(doc_name: &str) -> String {
    format!("Специалист \"<b>{doc_name}</b>\"\n\nВыберите <b>специальность</b>, для которой нужно изменить <b>цену (₽)</b>")
}

pub fn ask_to_choose_action(doc_name: &str) -> String {
    format!("Специалист \"<b>{doc_name}</b>\"\n\nПожалуйста выберите действие со специальностями")
}

/// Doctor info card shown during booking and at creation confirmation
pub fn doctor_card(doctor: &Doctor) -> String {
    let mut card = format!("<b>{}</b>\n{}", doctor.full_name, doctor.description);
    if let Some(experience) = doctor.experience {
        card.push_str(&format!("\n<b>📚 Стаж(лет)</b>: {experience}"));
    }
    if let Some(ref degree) = doctor.science_degree {
        card.push_str(&format!("\n<b>🔬 Степень</b>: {degree}"));
    }
    if let Some(ref category) = doctor.qual_category {
        card.push_str(&format!("\n<b>🏅 Категория</b>: {category}"));
    }
    card.push('\n');
    if doctor.specialities.len() == 1 {
        card.push_str(&format!("\n<b>✅ Цена</b>: {} ₽", doctor.specialities[0].price));
    } else {
        card.push_str("\n<b>💰 Цены</b>");
        for sp in &doctor.specialities {
            card.push_str(&format!("\n — <em>{}</em> — {} ₽", sp.title, sp.price));
        }
    }
    card
}

// ---------------------------------------------------------------------------
// Admin creation / deletion

pub const ASK_UID: &str = "Введите <b>уникальный id</b> пользователя в Telegram";

pub const ASK_UID_AGAIN: &str =
    "Введите уникальный id пользователя в Telegram в виде <b>целого числа без лишних символов</b>";

pub const ADMIN_ALREADY_EXISTS: &str =
    "❌❌❌\nАдминистратор с указанным id уже существует\n❌❌❌";

pub const ASK_ADMIN_NAME: &str = "Введите <b>имя</b> администратора, желательно в форме ФИО";

pub const ASK_PRIVILEGE_TYPE: &str = "Выберите уровень привилегий";

pub const SUCCESSFUL_ADMIN_CREATION: &str = "✅✅✅\nАдминистратор успешно добавлен!\n✅✅✅";

pub const ASK_TO_CHOOSE_ADMINS: &str =
    "Выберите <b>администраторов</b>, которых необходимо <b>удалить</b>";

pub const SUCCESSFUL_ADMINS_DELETION: &str = "✅✅✅\nАдминистраторы успешно удалены!\n✅✅✅";

pub fn confirm_creation(uid: i64, name: &str, high_privilege: bool) -> String {
    let privilege = if high_privilege { "Высокий ⬆" } else { "Низкий ⬇" };
    format!(
        "Подтвердите создание администратора с:\n\
         - <b>id</b>:  {uid}\n\
         - <b>Имя</b>:  {name}\n\
         - <b>Тип привилегий</b>:  {privilege}"
    )
}

pub fn confirm_deletion(employees: &[String]) -> String {
    format!(
        "Подтвердите удаление следующих сотрудников:\n<b>- {}</b>",
        employees.join("\n- ")
    )
}

// ---------------------------------------------------------------------------
// Statistics

pub const ASK_PERIOD: &str =
    "Укажите период, за который необходимо предоставить статистику, в формате:\n<b>ДД-ММ-ГГГГ ДД-ММ-ГГГГ</b>";

pub const ASK_PERIOD_AGAIN: &str =
    "Введите временной период в корректном формате:\n<b>ДД-ММ-ГГГГ ДД-ММ-ГГГГ</b>";

fn trend(value: f64) -> String {
    if value > 0.0 {
        format!("<b>+ {value}%</b> ⬆")
    } else if value < 0.0 {
        format!("<b>- {}%</b> ⬇", value.abs())
    } else {
        format!("<b>+ {value}%</b>")
    }
}

fn change_suffix(change: Option<f64>) -> String {
    change.map(|value| format!(" ⇒ {}", trend(value))).unwrap_or_default()
}

pub fn period_caption(period: Period) -> &'static str {
    match period {
        Period::Day => "за 24 ЧАСА",
        Period::Week => "за НЕДЕЛЮ",
        Period::Month => "за МЕСЯЦ",
        Period::Quarter => "за КВАРТАЛ",
        Period::Year => "за ГОД",
    }
}

/// Statistic report text; `caption` is either a canned-period caption or a
/// "dd/mm/yyyy - dd/mm/yyyy" range, `hashtag` marks scheduled broadcasts
pub fn statistic(report: &StatReport, caption: &str, hashtag: Option<&str>) -> String {
    let header = match hashtag {
        Some(tag) => format!("#отчет #{tag} #бот\n"),
        None => String::new(),
    };
    format!(
        "{header}📊 Статистика <b>{caption}</b>\n\n\
         Обратный звонок = {}{}\n\
         Очная консульт. = {}{}\n\
         Онлайн консульт. = {}{}\n\
         Обратная связь = {}\n\n\
         Новые польз-ли = {}{}",
        report.callbacks,
        change_suffix(report.callback_change),
        report.offline,
        change_suffix(report.offline_change),
        report.online,
        change_suffix(report.online_change),
        report.feedbacks,
        report.new_users,
        change_suffix(report.new_users_change),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trend_marks_direction() {
        assert_eq!(trend(50.0), "<b>+ 50%</b> ⬆");
        assert_eq!(trend(-99.0), "<b>- 99%</b> ⬇");
        assert_eq!(trend(0.0), "<b>+ 0%</b>");
    }

    #[test]
    fn statistic_includes_hashtag_for_broadcasts() {
        let report = StatReport { callbacks: 3, ..StatReport::default() };
        let text = statistic(&report, "за НЕДЕЛЮ", Some("неделя"));
        assert!(text.starts_with("#отчет #неделя #бот\n"));
        assert!(text.contains("Обратный звонок = 3"));
    }
}
